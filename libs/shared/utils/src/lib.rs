pub mod scope_token;
pub mod test_utils;
