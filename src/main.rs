// SPDX-License-Identifier: MIT

use std::rc::Rc;

use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use defaults_bind::cli::build_cli;
use defaults_bind::{Domain, ListBinding, PrefValue, ProxyRef, open_store};

fn main() {
    let matches = build_cli().get_matches();

    if let Err(e) = setup_tracing(matches.get_flag("verbose")).and_then(|()| run(&matches)) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn setup_tracing(verbose: bool) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn run(matches: &ArgMatches) -> Result<()> {
    let Some((cmd, sub_m)) = matches.subcommand() else {
        bail!("a subcommand is required");
    };

    let domain = Domain::parse(required(sub_m, "domain")?);
    let store = open_store(&domain).with_context(|| format!("opening {domain}"))?;
    let key = sub_m.get_one::<String>("key").map(String::as_str);

    match (cmd, key) {
        ("read", None) => {
            let store = store.borrow();
            for key in store.keys()? {
                if let Some(value) = store.get(&key)? {
                    println!("{key} = {value}");
                }
            }
            Ok(())
        }
        ("read", Some(key)) => {
            let value = store
                .borrow()
                .get(key)?
                .with_context(|| format!("key not found for domain {domain}: {key}"))?;
            println!("{value}");
            Ok(())
        }
        ("write", Some(key)) => {
            let value = scalar_value(sub_m)?;
            store.borrow_mut().set(key, value)?;
            println!("OK");
            Ok(())
        }
        ("delete", Some(key)) => {
            store.borrow_mut().remove(key)?;
            println!("OK");
            Ok(())
        }
        (_, Some(key)) => edit_list(cmd, sub_m, ListBinding::new(key, store)),
        _ => bail!("`{cmd}` needs a key"),
    }
}

fn edit_list(cmd: &str, sub_m: &ArgMatches, list: ListBinding) -> Result<()> {
    match cmd {
        "list" => {}
        "append" => {
            let mut proxies = list.current_proxies()?.borrow().clone();
            proxies.push(list.new_proxy(required(sub_m, "value")?));
            list.replace_proxies(proxies)?;
        }
        "set" => {
            let index = index_arg(sub_m, "index")?;
            let proxy = proxy_at(&list, index)?;
            list.set_element_value(&proxy, required(sub_m, "value")?)?;
        }
        "remove" => {
            let doomed: Vec<usize> = sub_m
                .get_many::<usize>("index")
                .map(|v| v.copied().collect())
                .unwrap_or_default();
            let proxies = list.current_proxies()?.borrow().clone();
            if let Some(bad) = doomed.iter().find(|i| **i >= proxies.len()) {
                bail!("index {bad} out of range (length {})", proxies.len());
            }
            let kept = proxies
                .into_iter()
                .enumerate()
                .filter(|(i, _)| !doomed.contains(i))
                .map(|(_, p)| p)
                .collect();
            list.replace_proxies(kept)?;
        }
        "move" => {
            let from = index_arg(sub_m, "from")?;
            let to = index_arg(sub_m, "to")?;
            let mut proxies = list.current_proxies()?.borrow().clone();
            if from >= proxies.len() || to >= proxies.len() {
                bail!("indices {from}, {to} out of range (length {})", proxies.len());
            }
            let proxy = proxies.remove(from);
            proxies.insert(to, proxy);
            list.replace_proxies(proxies)?;
        }
        other => bail!("unknown command `{other}`"),
    }
    print_list(&list)
}

fn print_list(list: &ListBinding) -> Result<()> {
    let proxies = list.current_proxies()?;
    for proxy in proxies.borrow().iter() {
        let proxy = proxy.borrow();
        match proxy.index() {
            Some(i) => println!("{i:>3}  {}", proxy.value()),
            None => println!("  -  {}", proxy.value()),
        }
    }
    Ok(())
}

fn proxy_at(list: &ListBinding, index: usize) -> Result<ProxyRef> {
    let proxies = list.current_proxies()?;
    let proxies = proxies.borrow();
    proxies
        .get(index)
        .map(Rc::clone)
        .with_context(|| format!("index {index} out of range (length {})", proxies.len()))
}

fn scalar_value(sub_m: &ArgMatches) -> Result<PrefValue> {
    for flag in ["int", "float", "bool", "string"] {
        if let Some(raw) = sub_m.get_one::<String>(flag) {
            return Ok(PrefValue::from_flag(flag, raw)?);
        }
    }
    bail!("one of --int, --float, --bool or --string is required")
}

fn required<'a>(sub_m: &'a ArgMatches, name: &str) -> Result<&'a str> {
    sub_m
        .get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("{name} required"))
}

fn index_arg(sub_m: &ArgMatches, name: &str) -> Result<usize> {
    sub_m
        .get_one::<usize>(name)
        .copied()
        .with_context(|| format!("{name} required"))
}
