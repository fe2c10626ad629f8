// SPDX-License-Identifier: MIT

//! CLI definition for `dbind`.

use clap::{Arg, ArgAction, Command};

pub fn build_cli() -> Command {
    let domain = || {
        Arg::new("domain")
            .help("Domain (e.g. com.example.app / -g / NSGlobalDomain) or a plist path")
            .required(true)
            .index(1)
            .allow_hyphen_values(true)
    };

    let key = |req| {
        let mut a = Arg::new("key").help("Preference key").index(2);
        if req {
            a = a.required(true)
        }
        a
    };

    let index = |name: &'static str, pos: usize, help: &'static str| {
        Arg::new(name)
            .help(help)
            .required(true)
            .index(pos)
            .value_parser(clap::value_parser!(usize))
    };

    let scalar_flag = |name: &'static str, short: char, help: &'static str| {
        Arg::new(name)
            .short(short)
            .long(name)
            .num_args(1)
            .value_name("VALUE")
            .help(help)
    };

    Command::new("dbind")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log store and list operations")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("read")
                .about("Read a value, or every key of the domain")
                .arg(domain())
                .arg(key(false)),
        )
        .subcommand(
            Command::new("write")
                .about("Write a scalar value")
                .arg(domain())
                .arg(key(true))
                .arg(scalar_flag("int", 'i', "Write an integer value"))
                .arg(scalar_flag("float", 'f', "Write a float value"))
                .arg(scalar_flag(
                    "bool",
                    'b',
                    "Write a boolean value (true/false/1/0/yes/no)",
                ))
                .arg(scalar_flag("string", 's', "Write a string value"))
                .group(
                    clap::ArgGroup::new("value")
                        .args(["int", "float", "bool", "string"])
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete a key")
                .arg(domain())
                .arg(key(true)),
        )
        .subcommand(
            Command::new("list")
                .about("Show a list with element indices")
                .arg(domain())
                .arg(key(true)),
        )
        .subcommand(
            Command::new("append")
                .about("Append a string to a list")
                .arg(domain())
                .arg(key(true))
                .arg(Arg::new("value").help("Value to append").required(true).index(3)),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove list elements by index")
                .arg(domain())
                .arg(key(true))
                .arg(
                    Arg::new("index")
                        .help("Indices to remove")
                        .required(true)
                        .index(3)
                        .num_args(1..)
                        .value_parser(clap::value_parser!(usize)),
                ),
        )
        .subcommand(
            Command::new("set")
                .about("Replace one list element")
                .arg(domain())
                .arg(key(true))
                .arg(index("index", 3, "Index of the element"))
                .arg(Arg::new("value").help("New value").required(true).index(4)),
        )
        .subcommand(
            Command::new("move")
                .about("Move a list element to another position")
                .arg(domain())
                .arg(key(true))
                .arg(index("from", 3, "Current index"))
                .arg(index("to", 4, "Target index")),
        )
}
