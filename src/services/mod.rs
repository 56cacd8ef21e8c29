pub mod avatar_store;
pub mod password;
pub mod todo_collection;
pub mod user_directory;

pub use avatar_store::AvatarStore;
pub use password::CredentialHasher;
pub use todo_collection::TodoCollection;
pub use user_directory::UserDirectory;
