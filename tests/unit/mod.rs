// Unit tests over the public API
//
// Organized by component:
// - sync_flow: snapshot handoff scenarios through Linker + Ladder
// - impact_window: rolling trade impact window behavior
// - frame_decode: inbound frame taxonomy

pub mod frame_decode_tests;
pub mod impact_window_tests;
pub mod sync_flow_tests;
