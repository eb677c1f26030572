pub mod episode_list;
pub mod filter_input;
pub mod toast;
