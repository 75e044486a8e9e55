mod duplicate_bb;
mod equivalence;
mod selector;
