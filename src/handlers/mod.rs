// Handlers are thin request/response shaping over the provisioning core:
// public (login proxy), authenticated requester operations, and the
// admin review queue. Authorization happens in the middleware layers.
pub mod admin;
pub mod auth;
pub mod requests;
