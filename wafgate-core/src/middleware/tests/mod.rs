mod recorder_tests;
pub(crate) mod test_helpers;
