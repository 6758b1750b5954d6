// CareHub-api lib.rs
//
// HTTP layer of the CareHub platform: routes, handlers, request/response
// entities and the OpenAPI document.

// Public modules
pub mod api;
pub mod entities;
pub mod openapi;
