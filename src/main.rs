//! seal CLI

use itemseal::{
    store, ItemSigner, KeyAlgorithm, KeyPair, LocalBus, NodeConfig, PublicKey, SealError,
    SealResult, SignaturePropagator, SignatureVerifier,
};
use std::env;
use std::path::Path;
use std::sync::Arc;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        return;
    }

    let outcome = match args[1].as_str() {
        "help" | "--help" | "-h" => {
            print_help();
            Ok(true)
        }
        "keygen" => with_args(&args, 4, "seal keygen <name> <secret-file>", keygen),
        "sign" => with_args(
            &args,
            6,
            "seal sign <secret-file> <record-file> <item-data> <signed-by>",
            sign,
        ),
        "verify" => with_args(
            &args,
            5,
            "seal verify <public-key|file> <record-file> <item-data>",
            verify,
        ),
        "show" => with_args(&args, 3, "seal show <record-file>", show),
        "node" => with_args(&args, 5, NODE_USAGE, node),
        "status" => {
            println!("\nitemseal");
            println!("========");
            println!("Version:  {}", env!("CARGO_PKG_VERSION"));
            println!("Crypto:   {} (ed25519-dalek)", KeyAlgorithm::default().name());
            println!("Digest:   SHA-256\n");
            Ok(true)
        }
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            print_help();
            std::process::exit(1);
        }
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Run `cmd` if at least `min` arguments were given, else print `usage`.
fn with_args(
    args: &[String],
    min: usize,
    usage: &str,
    cmd: fn(&[String]) -> SealResult<bool>,
) -> SealResult<bool> {
    if args.len() < min {
        eprintln!("Usage: {}", usage);
        std::process::exit(1);
    }
    cmd(&args[2..])
}

fn keygen(args: &[String]) -> SealResult<bool> {
    let path = Path::new(&args[1]);
    if path.exists() {
        eprintln!("Refusing to overwrite {}", path.display());
        return Ok(false);
    }
    let keypair = KeyPair::load_or_generate(path, &args[0], KeyAlgorithm::default())?;
    println!("{}", keypair.encoded_public());
    println!("Fingerprint: {}", keypair.public.fingerprint());
    Ok(true)
}

fn sign(args: &[String]) -> SealResult<bool> {
    let keypair = KeyPair::from_encoded_secret(&std::fs::read_to_string(&args[0])?)?;
    let record_path = Path::new(&args[1]);
    let last = store::load(record_path).map_or(0, |r| r.version);
    let version = last.checked_add(1).ok_or(SealError::VersionExhausted(last))?;

    let record = ItemSigner::new().sign(args[2].as_bytes(), &args[3], &keypair, version);
    store::save(record_path, &record)?;

    println!("Signed by: {}", record.signed_by);
    println!("Signature: {}", record.signature_b64());
    Ok(true)
}

fn read_public_key(arg: &str) -> SealResult<PublicKey> {
    let encoded = if Path::new(arg).is_file() {
        std::fs::read_to_string(arg)?
    } else {
        arg.to_string()
    };
    Ok(PublicKey::from_encoded(&encoded)?.1)
}

fn verify(args: &[String]) -> SealResult<bool> {
    let public_key = read_public_key(&args[0])?;
    let record = store::load(Path::new(&args[1]));
    let result = SignatureVerifier::new().verify(args[2].as_bytes(), record.as_ref(), &public_key);
    println!("{}", result);
    Ok(result.is_valid)
}

fn show(args: &[String]) -> SealResult<bool> {
    match store::load(Path::new(&args[0])) {
        Some(record) => {
            println!("Signature: {}", record.signature_b64());
            println!("Signed by: {}", record.signed_by);
            println!("Hash:      {}", record.item_data_hash);
            println!("Version:   {}", record.version);
            Ok(true)
        }
        None => {
            println!("No signature found.");
            Ok(false)
        }
    }
}

const NODE_USAGE: &str =
    "seal node <config.json> sign <item-data> <signed-by> | verify <item-data>";
const NODE_SIGN_USAGE: &str = "seal node <config.json> sign <item-data> <signed-by>";
const NODE_VERIFY_USAGE: &str = "seal node <config.json> verify <item-data>";

#[derive(Debug, PartialEq)]
enum NodeAction<'a> {
    Sign { data: &'a str, signed_by: &'a str },
    Verify { data: &'a str },
}

/// Parse `<config> <action> <args..>`; on failure return the message to print.
fn parse_node_action(args: &[String]) -> Result<NodeAction<'_>, String> {
    match args.get(1).map(String::as_str) {
        Some("sign") => match (args.get(2), args.get(3)) {
            (Some(data), Some(signed_by)) => Ok(NodeAction::Sign { data, signed_by }),
            _ => Err(format!("Usage: {}", NODE_SIGN_USAGE)),
        },
        Some("verify") => match args.get(2) {
            Some(data) => Ok(NodeAction::Verify { data }),
            None => Err(format!("Usage: {}", NODE_VERIFY_USAGE)),
        },
        Some(other) => Err(format!("Unknown node action: {}\nUsage: {}", other, NODE_USAGE)),
        None => Err(format!("Usage: {}", NODE_USAGE)),
    }
}

fn node(args: &[String]) -> SealResult<bool> {
    let action = match parse_node_action(args) {
        Ok(action) => action,
        Err(message) => {
            eprintln!("{}", message);
            return Ok(false);
        }
    };

    let config = NodeConfig::from_file(Path::new(&args[0]))?;
    let node = SignaturePropagator::from_config(&config, Arc::new(LocalBus::new()))?;

    match action {
        NodeAction::Sign { data, signed_by } => {
            let record = node.sign_as(data.as_bytes(), signed_by)?;
            println!("Signed by: {}", record.signed_by);
            println!("Signature: {}", record.signature_b64());
            Ok(true)
        }
        NodeAction::Verify { data } => {
            let result = node.verify(data.as_bytes());
            println!("{}", result);
            Ok(result.is_valid)
        }
    }
}

fn print_help() {
    println!("
itemseal CLI
============
Usage:
  seal help                                        Show this help
  seal status                                      Show engine status
  seal keygen <name> <secret-file>                 Generate a keypair
  seal sign <secret-file> <record> <data> <who>    Sign item data
  seal verify <public-key> <record> <data>         Verify item data
  seal show <record>                               Show a signature record
  seal node <config> sign <data> <who>             Sign as a configured node
  seal node <config> verify <data>                 Verify as a configured node
");
}
