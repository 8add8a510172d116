/// Inspect and modify a FAT12 or FAT16 disk image
/// Usage: cargo run --example fatdisk -- --image FILENAME COMMAND
///
/// Commands that change the disk write the modified image back to the
/// same file.
use std::fs;
use std::io::{stdout, Write};
use std::process::exit;

use clap::{Parser, Subcommand};
use config::Config;
use log::{error, info};

use fat_disk_view::{FatDiskOptions, FatDiskView, FatType, SanityCheck};

/// Command line arguments to work with an image file
#[derive(Parser, Debug)]
#[clap(about, version, author)]
struct Args {
    /// Image file to open
    #[clap(short, long)]
    image: String,

    /// Explicitly specify the FAT encoding, FAT12 or FAT16
    /// Detected from the cluster count when not given
    #[clap(short, long)]
    format: Option<String>,

    /// Verbose mode will print information about the image
    #[clap(short, long)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the volume layout and free space
    Info,
    /// List a directory
    Ls {
        /// Directory to list, the root directory if not given
        path: Option<String>,
    },
    /// Print a file to stdout
    Cat {
        /// File on the image
        path: String,
    },
    /// Copy a host file onto the image, creating it if needed
    Put {
        /// Destination path on the image
        path: String,
        /// File to read from the host
        host_file: String,
    },
    /// Create a directory
    Mkdir {
        /// Directory to create on the image
        path: String,
    },
}

/// Settings merged from the config file and environment
#[derive(Debug, Default)]
struct Settings {
    format: Option<String>,
    verbose: bool,
}

fn parse_format(format: &str) -> Option<FatType> {
    match format.to_ascii_uppercase().as_str() {
        "FAT12" | "12" => Some(FatType::Fat12),
        "FAT16" | "16" => Some(FatType::Fat16),
        _ => None,
    }
}

/// Run one command against the disk
/// Returns true if the image was modified
fn run(disk: &mut FatDiskView<&mut [u8]>, command: &Command) -> fat_disk_view::Result<bool> {
    match command {
        Command::Info => {
            println!("{}", disk);
            println!("{}", disk.geometry().bios_parameter_block);
            Ok(false)
        }
        Command::Ls { path } => {
            let directory = disk.get_directory_at_path(path.as_deref().unwrap_or("/"))?;
            for entry in disk.directory_iter(directory)? {
                let entry = disk.entry(entry);
                if !entry.is_volume_label() && !entry.is_deleted() {
                    println!("{}", entry);
                }
            }
            Ok(false)
        }
        Command::Cat { path } => {
            let file = disk.get_file_at_path(path)?;
            let data = disk.get_file_contents(file)?;
            if let Err(e) = stdout().write_all(&data) {
                error!("Error writing to stdout: {}", e);
            }
            Ok(false)
        }
        Command::Put { path, host_file } => {
            let data = match fs::read(host_file) {
                Ok(data) => data,
                Err(e) => {
                    error!("Error reading {}: {}", host_file, e);
                    exit(1);
                }
            };
            let file = match disk.get_file_at_path(path) {
                Ok(file) => file,
                Err(fat_disk_view::FatError::NotFound { .. }) => disk.create_file_at_path(path)?,
                Err(e) => return Err(e),
            };
            disk.set_file_contents(file, &data)?;
            info!("wrote {} bytes to {}", data.len(), path);
            Ok(true)
        }
        Command::Mkdir { path } => {
            disk.create_directory_at_path(path)?;
            Ok(true)
        }
    }
}

fn main() {
    // Initialize logger
    if let Err(e) = env_logger::try_init() {
        panic!("couldn't initialize logger: {:?}", e);
    }

    let settings = match load_settings("config/fatdisk") {
        Ok(config) => {
            info!("merged in config");
            Settings {
                format: config.get_string("format").ok(),
                verbose: config.get_bool("verbose").unwrap_or(false),
            }
        }
        Err(e) => {
            error!("error loading config: {:?}", e);
            Settings::default()
        }
    };

    // Parse command line arguments, they win over the config file
    let args = Args::parse();
    let verbose = args.verbose || settings.verbose;

    let format = match args.format.or(settings.format) {
        Some(name) => match parse_format(&name) {
            Some(format) => Some(format),
            None => {
                error!("Unknown FAT format: {}", name);
                exit(1);
            }
        },
        None => None,
    };

    let mut data = match fs::read(&args.image) {
        Ok(data) => data,
        Err(e) => {
            error!("Error reading {}: {}", args.image, e);
            exit(1);
        }
    };
    info!("Read {}: {} bytes", args.image, data.len());

    let mut disk = match FatDiskView::open(&mut data[..], &FatDiskOptions { format }) {
        Ok(disk) => disk,
        Err(e) => {
            error!("{}", e);
            exit(1);
        }
    };

    if verbose {
        println!("Disk: {}", disk);
    }
    if !disk.check() {
        error!("Image failed sanity checks, continuing");
    }

    let modified = match run(&mut disk, &args.command) {
        Ok(modified) => modified,
        Err(e) => {
            error!("{}", e);
            exit(1);
        }
    };

    if modified {
        if let Err(e) = fs::write(&args.image, &data) {
            error!("Error writing {}: {}", args.image, e);
            exit(1);
        }
    }

    exit(0);
}

/// load settings from a config file
/// returns the config settings as a Config on success, or a ConfigError on failure
fn load_settings(config_name: &str) -> Result<Config, config::ConfigError> {
    Config::builder()
        // Add in config file
        .add_source(config::File::with_name(config_name).required(false))
        // Add in settings from the environment (with a prefix of FATDISK)
        // Eg.. `FATDISK_FORMAT=fat16` forces FAT16
        .add_source(config::Environment::with_prefix("FATDISK"))
        .build()
}
