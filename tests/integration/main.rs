//! Integration test binary: full controller → ports pipeline against mock
//! adapters, without hardware or a broker.

mod controller_tests;
mod mocks;
