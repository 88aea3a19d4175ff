//! Integration tests of the coordinator and subscriber modules live in `tests/`.
