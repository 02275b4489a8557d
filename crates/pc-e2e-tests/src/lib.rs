//! Test-only crate. The end-to-end suites live under `tests/` and drive
//! `pc_nlu::Resolver` the way a chat front end would.
