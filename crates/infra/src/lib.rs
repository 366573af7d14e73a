//! Infrastructure layer: persistence for companies, users, menus and sessions.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{CompanyStore, MemberRecord, MembershipStore, MenuStore, SessionStore, Store, UserStore};
