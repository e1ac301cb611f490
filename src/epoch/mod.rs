// Copyright 2023-2025 StorSwift Inc.
// SPDX-License-Identifier: Apache-2.0

pub mod data;
pub mod store;
pub mod validation;

pub use data::{DkgPhase, EpochBlsData, GroupKeyValidationState, PartialSignature};
pub use store::{EpochStore, Event, EventSink, StoreError, ValidationStore};
pub use validation::{GroupKeyValidator, SubmitOutcome, ValidationError};
