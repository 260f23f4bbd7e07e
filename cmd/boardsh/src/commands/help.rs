//! `help`: print the list of commands this shell understands.

const HELP_TEXT: &str = "\
ls [path]                    list a directory
cat <path>                   print a file's contents
cp <src> <dst>                copy a file; prefix a path with ':' to force the device side
rm <path>                    remove a file or directory
mkdir <path>                  create a directory
rsync <src> <dst> [-m] [--dry-run] copy stale entries onto the device or back; -m/--mirror also deletes destination-only entries
edit <path>                  download, edit in $EDITOR, and write back
cd [path]                     change the shell's current directory
repl                          open a passthrough terminal to the device (Ctrl-X to leave)
connect [port] [-b baud]      attach to a serial port, or autoscan if none given
disconnect                    detach from the current device
exit                          leave the shell
help                          show this text\
";

pub fn handle_help(use_json: bool) {
	if use_json {
		tracing::info!(id = "boardsh::help::shown");
	}
	println!("{HELP_TEXT}");
}
