pub mod entity;
pub mod error;
pub mod serializer;
pub mod shorten;
pub mod snapshot;
pub mod source;

#[cfg(test)]
pub(crate) mod fixture;
