pub mod agent_gateway;
pub mod auth_service;
pub mod chat_service;
pub mod document_service;
pub mod object_store;
