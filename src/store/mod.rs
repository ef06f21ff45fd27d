pub mod mem;
pub mod pg;

pub use mem::MemStore;
pub use pg::PgStore;
