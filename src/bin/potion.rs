//! Potion CLI
//!
//! Command-line interface for inspecting hypermedia schemas and reading
//! resources from a hypermedia API.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use potion_client::{
    load_schema_auto, Client, ClientError, ClientOptions, JsonType, ResourceType,
    TransportOptions,
};
use serde_json::{json, Map, Value};

#[derive(Parser)]
#[command(name = "potion")]
#[command(about = "Inspect hypermedia schemas and browse hypermedia APIs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Describe the properties and links of a resource schema
    Describe {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// Resource type name (default: file stem)
        #[arg(long)]
        name: Option<String>,

        /// Output as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Fetch one resource instance
    Get {
        #[command(flatten)]
        server: ServerArgs,

        /// Resource type, e.g. "user"
        resource: String,

        /// Instance id
        id: String,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// List resource instances, following pagination
    List {
        #[command(flatten)]
        server: ServerArgs,

        /// Resource type, e.g. "user"
        resource: String,

        /// Page size requested from the server
        #[arg(long)]
        per_page: Option<u64>,

        /// Filter as a JSON object, passed as the `where` argument
        #[arg(long = "where")]
        filter: Option<String>,

        /// Sort as a JSON object, passed as the `sort` argument
        #[arg(long)]
        sort: Option<String>,

        /// Stop after this many items
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Args)]
struct ServerArgs {
    /// API root, e.g. https://api.example.com
    #[arg(long, env = "POTION_BASE_URL")]
    base_url: String,

    /// Resource schema to use instead of discovering it from the server
    #[arg(long)]
    schema: Option<String>,

    /// Extra request header as NAME:VALUE (repeatable)
    #[arg(long = "header", short = 'H')]
    headers: Vec<String>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("POTION_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Describe { schema, name, json } => run_describe(&schema, name, json),
        Commands::Get {
            server,
            resource,
            id,
            pretty,
        } => run_get(&server, &resource, &id, pretty),
        Commands::List {
            server,
            resource,
            per_page,
            filter,
            sort,
            limit,
        } => run_list(ListArgs {
            server,
            resource,
            per_page,
            filter,
            sort,
            limit,
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn fail(e: ClientError) -> u8 {
    eprintln!("Error: {}", e);
    if let ClientError::SchemaValidation { errors } = &e {
        for error in errors {
            eprintln!("  {}", error);
        }
    }
    e.exit_code() as u8
}

fn run_describe(source: &str, name: Option<String>, json_output: bool) -> Result<(), u8> {
    let schema = load_schema_auto(source).map_err(fail)?;
    let name = name.unwrap_or_else(|| {
        Path::new(source)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("resource")
            .to_string()
    });
    let resource_type =
        ResourceType::from_schema(&name, &schema, &TransportOptions::default()).map_err(fail)?;

    if json_output {
        println!("{}", describe_json(&resource_type));
    } else {
        print!("{}", describe_text(&resource_type));
    }
    Ok(())
}

fn describe_json(resource_type: &ResourceType) -> Value {
    let properties: Vec<Value> = resource_type
        .properties()
        .map(|p| {
            json!({
                "name": p.name(),
                "types": type_names(&p.attribute().types()),
                "readOnly": p.attribute().read_only(),
            })
        })
        .collect();
    let links: Vec<Value> = resource_type
        .instance_links()
        .map(|l| (l, "instance"))
        .chain(resource_type.type_links().map(|l| (l, "type")))
        .map(|(l, binding)| {
            json!({
                "rel": l.rel(),
                "method": l.method(),
                "href": l.route().path(),
                "shape": l.shape().as_str(),
                "binding": binding,
            })
        })
        .collect();
    json!({
        "name": resource_type.name(),
        "description": resource_type.doc(),
        "properties": properties,
        "links": links,
    })
}

fn describe_text(resource_type: &ResourceType) -> String {
    let mut out = String::new();
    match resource_type.doc() {
        Some(doc) => out.push_str(&format!("{}: {}\n", resource_type.name(), doc)),
        None => out.push_str(&format!("{}\n", resource_type.name())),
    }

    out.push_str("\nProperties:\n");
    for p in resource_type.properties() {
        let read_only = if p.writable() { "" } else { " (read-only)" };
        out.push_str(&format!(
            "  {:<20} {}{}\n",
            p.name(),
            type_names(&p.attribute().types()).join("|"),
            read_only
        ));
    }

    out.push_str("\nLinks:\n");
    for link in resource_type.instance_links().chain(resource_type.type_links()) {
        out.push_str(&format!(
            "  {:<12} {:<7} {:<24} -> {}\n",
            link.rel(),
            link.method(),
            link.route().path(),
            link.shape().as_str()
        ));
    }
    out
}

fn type_names(types: &[JsonType]) -> Vec<&'static str> {
    types.iter().map(JsonType::as_str).collect()
}

fn connect(server: &ServerArgs, resource: &str) -> Result<(Client, Arc<ResourceType>), u8> {
    let mut options =
        ClientOptions::new(server.base_url.as_str()).timeout(Duration::from_secs(server.timeout));
    for header in &server.headers {
        let Some((name, value)) = header.split_once(':') else {
            eprintln!("Error: header '{}' is not NAME:VALUE", header);
            return Err(2);
        };
        options = options.header(name.trim(), value.trim());
    }
    let client = Client::new(options).map_err(fail)?;

    match &server.schema {
        Some(source) => {
            let schema = load_schema_auto(source).map_err(fail)?;
            client.register_schema(resource, &schema).map_err(fail)?;
        }
        None => {
            client.discover().map_err(fail)?;
        }
    }

    let resource_type = client.resource_type(resource).ok_or_else(|| {
        fail(ClientError::UnknownResource {
            uri: resource.to_string(),
        })
    })?;
    Ok((client, resource_type))
}

fn run_get(server: &ServerArgs, resource: &str, id: &str, pretty: bool) -> Result<(), u8> {
    let (client, resource_type) = connect(server, resource)?;
    let instance = potion_client::Resource::with_id(&client, &resource_type, id);

    let mut out = Map::new();
    for property in resource_type.properties() {
        let value = instance.get(property.accessor()).map_err(fail)?;
        out.insert(property.name().to_string(), value);
    }
    print_json(&Value::Object(out), pretty)
}

struct ListArgs {
    server: ServerArgs,
    resource: String,
    per_page: Option<u64>,
    filter: Option<String>,
    sort: Option<String>,
    limit: Option<usize>,
}

fn run_list(args: ListArgs) -> Result<(), u8> {
    let (client, resource_type) = connect(&args.server, &args.resource)?;
    let mut list = resource_type
        .link("instances", &client)
        .and_then(|proxy| proxy.into_list())
        .map_err(fail)?;

    if let Some(per_page) = args.per_page {
        list = list.arg("per_page", per_page).map_err(fail)?;
    }
    for (name, text) in [("where", &args.filter), ("sort", &args.sort)] {
        if let Some(text) = text {
            let value: Value = serde_json::from_str(text).map_err(|e| {
                eprintln!("Error: --{} is not valid JSON: {}", name, e);
                2u8
            })?;
            list = list.arg(name, value).map_err(fail)?;
        }
    }

    for item in list.iter().take(args.limit.unwrap_or(usize::MAX)) {
        let item = item.map_err(fail)?;
        print_json(&item.to_value(), false)?;
    }
    Ok(())
}

fn print_json(value: &Value, pretty: bool) -> Result<(), u8> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    println!("{}", text);
    Ok(())
}
