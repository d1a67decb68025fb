pub mod candidate_search;
pub mod primal_dual;
