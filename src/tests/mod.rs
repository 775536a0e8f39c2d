mod end_to_end_test;
mod invariants_test;
