pub mod concurrent_helper;
pub mod request_helper;
#[cfg(test)]
pub(crate) mod test_client;
