use clap::Args;
use serde::{Serialize, de::DeserializeOwned};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write, stdin, stdout},
    path::PathBuf,
    str::FromStr,
};

// Subcommands that consume a JSON document share a notion of input and output.
// This struct standardizes their implementation.
#[derive(Args)]
pub struct IOArgs {
    /// The input JSON file ("-" implies stdin)
    #[arg(value_parser = clap::value_parser!(PathOrStd))]
    input: PathOrStd,

    /// The output file ("-" implies stdout)
    #[arg(short, long, default_value = "-", value_parser = clap::value_parser!(PathOrStd))]
    output: PathOrStd,
}

impl IOArgs {
    fn reader(&self) -> anyhow::Result<Box<dyn Read>> {
        match &self.input {
            PathOrStd::Path(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
            PathOrStd::Std => Ok(Box::new(stdin().lock())),
        }
    }

    fn writer(&self) -> anyhow::Result<Box<dyn Write>> {
        match &self.output {
            PathOrStd::Path(path) => Ok(Box::new(BufWriter::new(File::create(path)?))),
            PathOrStd::Std => Ok(Box::new(stdout().lock())),
        }
    }

    /// Parse the input as JSON
    pub fn read_json<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        Ok(serde_json::from_reader(self.reader()?)?)
    }

    /// Write a value as pretty-printed JSON
    pub fn write_json<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        let mut output = self.writer()?;
        serde_json::to_writer_pretty(&mut output, value)?;
        writeln!(output)?;
        output.flush()?;
        Ok(())
    }

    /// Write a single line of text
    pub fn write_line(&self, line: &str) -> anyhow::Result<()> {
        let mut output = self.writer()?;
        writeln!(output, "{line}")?;
        output.flush()?;
        Ok(())
    }
}

#[derive(Clone)]
enum PathOrStd {
    Path(PathBuf),
    Std,
}

impl FromStr for PathOrStd {
    type Err = <PathBuf as FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "-" {
            Ok(Self::Std)
        } else {
            Ok(Self::Path(s.parse()?))
        }
    }
}
