pub mod detection;
pub mod pipeline;
pub mod protocol;
pub mod shared;

#[cfg(test)]
pub(crate) mod test_support;
