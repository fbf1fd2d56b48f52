mod response;

pub use response::{diagnostic, map_cmd_result_to_json, print_json_result};
