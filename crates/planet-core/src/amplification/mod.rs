//! Stage-B amplification: layers high-frequency detail onto the baseline
//! (Stage-A) elevation field without feeding back into plate kinematics.
//! Oceanic vertices get transform-fault noise; continental vertices get a
//! weighted blend of real-world exemplar heightfields.

pub mod cache;
pub mod continental;
pub mod exemplar;
pub mod oceanic;
