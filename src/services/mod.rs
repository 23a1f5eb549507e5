pub mod db;
pub mod error;
pub mod fault;
#[cfg(test)]
pub mod mem;
pub mod orders;
pub mod scope;
pub mod tx;
pub mod uow;
