mod escalation_test;
mod fallback_chain_test;
