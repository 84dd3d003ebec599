pub mod support;
pub mod test_end_to_end;
