//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! HTTP surface for the schema registry
//!
//! This module contains the axum router, the endpoint handlers, the wire
//! request/response types and the middleware stack.

pub mod error;
pub mod middleware;
pub mod requests;
pub mod responses;
pub mod server;
pub mod subjects;

pub use server::{build_router, serve};
