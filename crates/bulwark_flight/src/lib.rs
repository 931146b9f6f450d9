// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Coalesces concurrent calls for the same key into a single execution.
//!
//! [`SingleflightGroup`] prevents a stampede on a slow dependency: when many callers ask for
//! the same key at once, only the first runs its producer and every other caller waits for
//! and receives a clone of that result. Errors are shared the same way, so `T` is usually a
//! `Result` whose error type is cheap to clone.
//!
//! Nothing is remembered after a call completes. A call that starts after the previous one
//! finished runs its producer again; caching results is somebody else's job.
//!
//! # Example
//!
//! ```
//! use bulwark_flight::SingleflightGroup;
//!
//! # futures::executor::block_on(async {
//! let group: SingleflightGroup<&str, String> = SingleflightGroup::new();
//!
//! let profile = group.work("user:123", || async { "Contoso".to_string() }).await;
//! assert_eq!(profile, "Contoso");
//! assert_eq!(group.in_flight(), 0);
//! # });
//! ```
//!
//! # Cancellation and Panics
//!
//! The caller currently running the producer holds the execution. If its future is dropped,
//! or the producer panics, one of the waiting callers takes over and runs its own producer.
//! Callers that arrive after a result was stored receive that result.

mod group;

pub use group::SingleflightGroup;
