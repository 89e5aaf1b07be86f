mod journal_test;
mod mirror_test;
mod mover_test;
mod orchestrator_test;
