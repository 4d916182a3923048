/// Command line argument handling.
pub mod argparse;
/// Entry points of the command line tools.
pub mod cmds;
pub mod log;
