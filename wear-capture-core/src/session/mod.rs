//! Button-driven capture sessions.

pub mod orchestrator;
