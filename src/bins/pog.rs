use std::env;
use vdm_tools_rs::tools::cmds::pog;

fn main() {
    let args: Vec<String> = env::args().collect();
    pog(&args);
}
