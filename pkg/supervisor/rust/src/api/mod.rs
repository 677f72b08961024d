// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! HTTP control API.
//!
//! Routing is a static table ([`routes::ROUTES`]), handlers translate each
//! request into exactly one logical supervisor operation, and [`server`]
//! runs the hyper accept loop on TCP or a Unix socket.

pub mod codec;
pub mod handlers;
pub mod options;
pub mod routes;
pub mod server;

pub use handlers::ControlApi;
pub use options::{ApiOptions, BulkMode, ReloadAck};
pub use server::{ApiListener, serve};
