//! Testing utilities.
//!
//! This module provides:
//! - Scriptable mock contexts and a recording provider
//! - Geometry and event fixtures
//! - Assertions over event outcomes

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_no_hypotheses, assert_resolved, assert_single_slice, assert_stages_run,
};
#[cfg(test)]
pub use fixtures::TestFiles;
pub use fixtures::{event_stream, hits_across, volume_row, VOLUME_GAP_X, VOLUME_WIDTH_X};
pub use mocks::{MockContext, MockProvider, RecordedCall};
