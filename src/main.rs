use anyhow::{bail, Context, Result};
use kanecta_store_lib::{init_tracing, FieldValues, KanectaStore, StoreConfig, TrashKind, TreeNode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::env;
use std::fs;
use std::io::Read;
use std::process;
use uuid::Uuid;

const USAGE: &str = "Usage: kanecta <command>

Commands:
  template create <file|->          Create a template from a JSON request
  template get <typeId>             Show one template
  template list [--all]             List templates (--all includes deleted)
  template delete <typeId>          Soft-delete a template
  item create <typeId> key=value..  Create an item
  item get <itemId>                 Show one item
  item list <typeId>                List table rows that are not deleted
  item delete <itemId>              Soft-delete an item
  table <typeId>                    Show the table laid out by template fields
  tree                              Show the expanded outline tree
  tree add <file|->                 Append a node (JSON) to the outline tree
  trash <templates|items>           Show the trash ledger
  about                             Show version and data root

Environment:
  KANECTA_CONFIG  config file (default: config.json)
  KANECTA_ENV     config section (default: development)";

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("{}", USAGE);
        process::exit(1);
    }

    if let Err(error) = run(&args) {
        eprintln!("Error: {:#}", error);
        process::exit(1);
    }
}

fn run(args: &[String]) -> Result<()> {
    let config = StoreConfig::from_env()?;
    if let Err(error) = init_tracing(&config.log_dir()) {
        eprintln!("Logging disabled: {}", error);
    }
    let store = KanectaStore::new(config);

    let words: Vec<&str> = args.iter().map(String::as_str).collect();
    match words.as_slice() {
        ["template", "create", source] => print_json(&store.create_template(read_json(source)?)?),
        ["template", "get", type_id] => print_json(&store.get_template(&parse_id(type_id)?)?),
        ["template", "list"] => print_json(&store.active_templates()?),
        ["template", "list", "--all"] => print_json(&store.list_templates()?),
        ["template", "delete", type_id] => print_json(&store.delete_template(&parse_id(type_id)?)?),
        ["item", "create", type_id, pairs @ ..] => {
            let values = parse_pairs(pairs)?;
            print_json(&store.create_item(&parse_id(type_id)?, &values)?)
        }
        ["item", "get", item_id] => print_json(&store.get_item(&parse_id(item_id)?)?),
        ["item", "list", type_id] => print_json(&store.list_items(&parse_id(type_id)?)?),
        ["item", "delete", item_id] => print_json(&store.delete_item(&parse_id(item_id)?)?),
        ["table", type_id] => print_json(&store.table_view(&parse_id(type_id)?)?),
        ["tree"] => match store.tree_view()? {
            Some(nodes) => print_json(&nodes),
            None => {
                eprintln!("No tree exists");
                Ok(())
            }
        },
        ["tree", "add", source] => {
            let node: TreeNode = read_json(source)?;
            store.add_tree_node(&node)?;
            print_json(&node)
        }
        ["trash", kind] => {
            let Some(kind) = TrashKind::parse(kind) else {
                bail!("unknown trash kind '{}', expected templates or items", kind);
            };
            match store.get_trash(kind)? {
                Some(content) => print!("{}", content),
                None => eprintln!("Nothing in trash"),
            }
            Ok(())
        }
        ["about"] => print_json(&store.about()),
        _ => bail!("unknown command '{}'\n\n{}", words.join(" "), USAGE),
    }
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid id '{}'", raw))
}

fn parse_pairs(pairs: &[&str]) -> Result<FieldValues> {
    let mut values = FieldValues::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("expected key=value, got '{}'", pair);
        };
        values.insert(key.to_string(), value.to_string());
    }
    Ok(values)
}

fn read_json<T: DeserializeOwned>(source: &str) -> Result<T> {
    let raw = if source == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read stdin")?;
        buffer
    } else {
        fs::read_to_string(source).with_context(|| format!("failed to read {}", source))?
    };
    serde_json::from_str(&raw).with_context(|| format!("malformed JSON in {}", source))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
