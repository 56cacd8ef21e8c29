use serde::Serialize;

use crate::models::{PublicProfile, TodoItem};

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub success: bool,
    pub user: PublicProfile,
}

#[derive(Debug, Serialize)]
pub struct AvatarResponse {
    pub success: bool,
    pub message: String,
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct TodosResponse {
    pub success: bool,
    pub todos: Vec<TodoItem>,
}

#[derive(Debug, Serialize)]
pub struct TodoResponse {
    pub success: bool,
    pub todo: TodoItem,
}
