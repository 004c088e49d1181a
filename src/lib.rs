pub mod math;
pub mod constants;
pub mod error;
pub mod identity;
pub mod collections;
pub mod params;
pub mod state;
pub mod shapes;
pub mod components;
pub mod motion;
pub mod group;
pub mod hub;
pub mod output;
pub mod config;
pub mod cli;

pub use error::{HubError, HubResult};
pub use hub::{PositionStore, SourcePose, Target, TickReport, TrajectoryHub};

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
//
// Notes
//
// Coordinate system:
//  x/y is the horizontal plane, +z is up (elevation)
//  Orientation is (yaw, pitch, roll) = rotation about z, x, y, right hand rule, radians in [-pi, pi]
//
// Tick order:
//  1. every macro recomputes its centroid from the store and steps its shared trajectory phase once
//  2. every source, ascending id: copy pose out of the store -> collect deltas -> weighted sum -> add back
//  Nothing writes a position except step 2, and step 2 only adds
//
// Components:
//  concentration                     pull toward a point (or the macro centroid), never overshoots
//  individual/macro_trajectory       step along a closed parametric shape, phase in [0, 1)
//  individual/macro_rotation         free running angular velocity about a pivot
//  manual_individual/macro_rotation  ease toward target angles, then idle
//
// Macros:
//  Handles (MacroId) are never reused, names go through a separate lookup
//  A source is in at most one macro. Deleting a macro only takes back what the macro attached
//
///////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
