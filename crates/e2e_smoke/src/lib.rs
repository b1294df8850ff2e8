//! End-to-end tests for the dashboard live under `tests/`.
