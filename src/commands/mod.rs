// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod agreements;
pub mod plans;
pub mod simulate;
pub mod verify;
pub mod exporter;
pub mod settings;
