//! kform CLI - transform packages of Kubernetes resource configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod exit_codes;

use error::Result;

#[derive(Parser)]
#[command(name = "kform")]
#[command(author = "kform Contributors")]
#[command(version)]
#[command(about = "Transform packages of Kubernetes resource configuration", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run functions over a package
    #[command(subcommand)]
    Fn(FnCommands),

    /// Apply every kustomization.yaml under a directory, deepest first
    Kustomize {
        /// Directory to search for kustomizations
        dir: PathBuf,

        /// Also kustomize resources from subpackages
        #[arg(long)]
        include_subpackages: bool,

        /// Keep the file origin annotations on written resources
        #[arg(long)]
        annotate: bool,

        /// Print the result instead of writing it back
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the resources of a package
    Cat {
        /// Package directory
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Also read resources from subpackages
        #[arg(long)]
        include_subpackages: bool,

        /// Keep the file origin annotations
        #[arg(long)]
        annotate: bool,

        /// Also print function configs
        #[arg(long)]
        include_functions: bool,

        /// Wrap the output in a ResourceList
        #[arg(long)]
        wrap: bool,

        /// functionConfig of the wrapping ResourceList
        #[arg(long, requires = "wrap")]
        function_config: Option<PathBuf>,
    },

    /// Create configuration documents
    #[command(subcommand)]
    Create(CreateCommands),
}

#[derive(Subcommand)]
enum FnCommands {
    /// Run the functions of a package and write the result back
    Run {
        /// Package directory; reads stdin and writes stdout when omitted
        dir: Option<PathBuf>,

        /// Directory of globally scoped function configs
        #[arg(long = "fn-path")]
        fn_paths: Vec<PathBuf>,

        /// Run this container image as a global function
        #[arg(long)]
        image: Option<String>,

        /// Apply package functions to the whole package
        #[arg(long)]
        global_scope: bool,

        /// Allow functions that require network access
        #[arg(long)]
        network: bool,

        /// Container network granted to functions
        #[arg(long, env = "KFORM_NETWORK_NAME", default_value = kform_fn::runfn::DEFAULT_NETWORK_NAME)]
        network_name: String,

        /// Run script functions
        #[arg(long)]
        enable_script: bool,

        /// Do not run container functions
        #[arg(long)]
        disable_containers: bool,

        /// Fail when a function has no enabled backend instead of skipping it
        #[arg(long)]
        strict: bool,

        /// Read-only mount for container functions: type=bind,src=PATH,dst=PATH
        #[arg(long = "mount")]
        mounts: Vec<String>,

        /// Container CLI
        #[arg(long, env = "KFORM_DOCKER_BINARY", default_value = kform_fn::runtime::DEFAULT_CONTAINER_BINARY)]
        docker_binary: String,

        /// Interpreter for script functions
        #[arg(long, env = "KFORM_SCRIPT_INTERPRETER", default_value = kform_fn::runtime::DEFAULT_SCRIPT_INTERPRETER)]
        script_interpreter: String,

        /// Print the result instead of writing it back
        #[arg(long)]
        dry_run: bool,

        /// KEY=VALUE data for the --image function config
        #[arg(last = true)]
        args: Vec<String>,
    },
}

#[derive(Subcommand)]
enum CreateCommands {
    /// Create a kustomization.yaml in a directory
    Kustomization {
        /// Target directory
        dir: PathBuf,

        /// Name of the kustomization
        #[arg(long)]
        name: String,

        /// Common namespace
        #[arg(long)]
        namespace: Option<String>,

        /// Common name prefix
        #[arg(long)]
        name_prefix: Option<String>,

        /// Common name suffix
        #[arg(long)]
        name_suffix: Option<String>,

        /// Common annotation (KEY=VALUE)
        #[arg(long = "annotation")]
        annotations: Vec<String>,

        /// Common label (KEY=VALUE)
        #[arg(long = "label")]
        labels: Vec<String>,

        /// Common selector (KEY=VALUE)
        #[arg(long = "selector")]
        selectors: Vec<String>,
    },
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if err.use_stderr() => {
            let _ = err.print();
            std::process::exit(exit_codes::USAGE_ERROR);
        }
        Err(err) => err.exit(),
    };
    init_logging(cli.debug);

    if let Err(err) = run(cli.command) {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Fn(FnCommands::Run {
            dir,
            fn_paths,
            image,
            global_scope,
            network,
            network_name,
            enable_script,
            disable_containers,
            strict,
            mounts,
            docker_binary,
            script_interpreter,
            dry_run,
            args,
        }) => commands::fn_run::run(commands::fn_run::Options {
            dir,
            fn_paths,
            image,
            global_scope,
            network,
            network_name,
            enable_script,
            disable_containers,
            strict,
            mounts,
            docker_binary,
            script_interpreter,
            dry_run,
            args,
        }),

        Commands::Kustomize {
            dir,
            include_subpackages,
            annotate,
            dry_run,
        } => commands::kustomize::run(&dir, include_subpackages, annotate, dry_run),

        Commands::Cat {
            dir,
            include_subpackages,
            annotate,
            include_functions,
            wrap,
            function_config,
        } => commands::cat::run(
            &dir,
            include_subpackages,
            annotate,
            include_functions,
            wrap,
            function_config.as_deref(),
        ),

        Commands::Create(CreateCommands::Kustomization {
            dir,
            name,
            namespace,
            name_prefix,
            name_suffix,
            annotations,
            labels,
            selectors,
        }) => commands::create::run(commands::create::Options {
            dir,
            name,
            namespace,
            name_prefix,
            name_suffix,
            annotations,
            labels,
            selectors,
        }),
    }
}
