pub mod company;
pub mod consultation;
pub mod conversation_participant;
pub mod document;
pub mod job;
pub mod job_execution;
pub mod job_result;
pub mod job_status;
pub mod message;
pub mod notification;
pub mod scheduled_message;
pub mod spotlight;
pub mod websocket_message;
