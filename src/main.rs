mod device;
mod fs;
#[cfg(test)]
mod test;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};

use crate::device::BlockFile;
use crate::fs::{list_all, BlockDevice, FileHandle, FileSystem, MAX_BLOCKS_TRACKED, SECTOR_SIZE};

#[derive(Parser)]
#[command(about = "flat-namespace file system over a sector image")]
struct Cli {
    /// Path of the backing image. Created and sized on first use.
    #[arg(short, long, default_value = "flatfs.img")]
    image: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Lay down a fresh store, discarding any existing contents.
    Format,
    /// Create a new empty file.
    Create { name: String },
    /// Write text into a file at a byte offset.
    Write {
        name: String,
        text: String,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Append text after the file's last write.
    App { name: String, text: String },
    /// Print a file's contents.
    Printfile { name: String },
    /// Delete a file.
    Del { name: String },
    /// List all files with their sizes.
    Ls,
}

fn open_device(path: &PathBuf) -> std::io::Result<Arc<dyn BlockDevice>> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)?;
    file.set_len((MAX_BLOCKS_TRACKED as usize * SECTOR_SIZE) as u64)?;
    Ok(Arc::new(BlockFile(Mutex::new(file))))
}

fn run(cli: &Cli) -> fs::FsResult<()> {
    let device = open_device(&cli.image)?;
    if let Command::Format = cli.command {
        FileSystem::format(device)?;
        println!("formatted {}", cli.image.display());
        return Ok(());
    }
    let fs = FileSystem::mount(device)?;
    match &cli.command {
        Command::Format => unreachable!(),
        Command::Create { name } => {
            FileHandle::create(&fs, name)?.close()?;
        }
        Command::Write { name, text, offset } => {
            let mut handle = FileHandle::open(&fs, name)?;
            handle.write_at(*offset, text.as_bytes())?;
            handle.close()?;
        }
        Command::App { name, text } => {
            let mut handle = FileHandle::open(&fs, name)?;
            handle.append(text.as_bytes())?;
            handle.close()?;
        }
        Command::Printfile { name } => {
            let mut handle = FileHandle::open(&fs, name)?;
            let mut buf = vec![0u8; handle.size() as usize];
            handle.read_at(0, &mut buf)?;
            println!("{}", String::from_utf8_lossy(&buf));
            handle.close()?;
        }
        Command::Del { name } => {
            fs.lock().delete(name)?;
        }
        Command::Ls => {
            for entry in list_all(&fs) {
                let info = entry?;
                println!("{} :: {} bytes", info.name, info.used_bytes);
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
