use std::{env, fs, process};

fn main() {
    let mut args = env::args().skip(1);
    let (Some(old_path), Some(new_path)) = (args.next(), args.next()) else {
        eprintln!("usage: diff <old.html> <new.html>");
        process::exit(2);
    };
    let old = fs::read_to_string(&old_path).expect("read old file");
    let new = fs::read_to_string(&new_path).expect("read new file");
    let out = htmldiff::render_diff(&old, &new).expect("render diff");
    print!("{out}");
}
