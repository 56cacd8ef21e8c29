pub mod todo;
pub mod user;

pub use todo::{NewTodoRequest, TodoItem, UpdateTodoRequest};
pub use user::{LoginRequest, PublicProfile, RegisterRequest, UserRecord};
