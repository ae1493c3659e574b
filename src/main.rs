use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Error, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use heapdb::buffer::buffer_pool::BufferPool;
use heapdb::catalog::Catalog;
use heapdb::common::TableId;
use heapdb::concurrency::TransactionId;
use heapdb::executors::aggregate_executor::AggregateExecutor;
use heapdb::executors::aggregator::AggregateOp;
use heapdb::executors::insert_executor::InsertExecutor;
use heapdb::executors::seq_scan_executor::SeqScanExecutor;
use heapdb::executors::values_executor::ValuesExecutor;
use heapdb::executors::Executor;
use heapdb::storage::heap::file::HeapFile;
use heapdb::tuple::schema::{ColumnDefinition, Schema, TypeId};
use heapdb::tuple::value::Value;
use heapdb::tuple::Tuple;

#[derive(Parser)]
#[command(about = "Inspect and load heap files")]
struct Config {
    #[arg(long, default_value_t = 50, help = "Size of buffer pool")]
    pool_size: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct TableArgs {
    #[arg(help = "Path of the heap file")]
    heap_file: PathBuf,

    #[arg(
        long,
        value_delimiter = ',',
        required = true,
        help = "Column types of the table, e.g. int,string"
    )]
    types: Vec<TypeId>,
}

#[derive(Subcommand)]
enum Command {
    /// Loads the rows of a comma separated file into a heap file
    Convert {
        #[arg(help = "Comma separated input file")]
        csv: PathBuf,

        #[command(flatten)]
        table: TableArgs,
    },
    /// Prints every tuple of a heap file
    Print {
        #[command(flatten)]
        table: TableArgs,
    },
    /// Computes an aggregate over a heap file
    Aggregate {
        #[command(flatten)]
        table: TableArgs,

        #[arg(long, help = "One of min, max, sum, avg, count")]
        op: AggregateOp,

        #[arg(long, help = "Index of the aggregated column")]
        field: usize,

        #[arg(long, help = "Index of the column to group by")]
        group_by: Option<usize>,
    },
}

fn open_table(buffer_pool: &BufferPool, table: &TableArgs) -> Result<TableId> {
    let columns = table
        .types
        .iter()
        .enumerate()
        .map(|(i, type_id)| ColumnDefinition::new(*type_id, format!("col{i}")))
        .collect();
    let file = HeapFile::open(&table.heap_file, Schema::new(columns))?;
    let table_id = file.id();
    let name = table
        .heap_file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| table_id.to_string());
    buffer_pool.catalog().add_table(Arc::new(file), &name);
    Ok(table_id)
}

fn parse_line(line: &str, types: &[TypeId]) -> Result<Tuple> {
    let fields = line.split(',').map(str::trim).collect::<Vec<_>>();
    if fields.len() != types.len() {
        return Err(Error::msg(format!(
            "Expected {} fields, found {}",
            types.len(),
            fields.len()
        )));
    }
    let values = fields
        .iter()
        .zip(types)
        .map(|(field, type_id)| match type_id {
            TypeId::Integer => field
                .parse::<i32>()
                .map(Value::Integer)
                .with_context(|| format!("Invalid integer {field}")),
            TypeId::Text => Ok(Value::string(*field)),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Tuple::new(values))
}

fn convert(buffer_pool: &BufferPool, csv: &Path, table: &TableArgs) -> Result<()> {
    let table_id = open_table(buffer_pool, table)?;
    let content = fs::read_to_string(csv)
        .with_context(|| format!("Failed to read {}", csv.display()))?;
    let tuples = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(line_no, line)| {
            parse_line(line, &table.types).with_context(|| format!("Line {}", line_no + 1))
        })
        .collect::<Result<Vec<_>>>()?;

    let schema = buffer_pool.catalog().get_schema(table_id)?;
    let values = ValuesExecutor::new(schema, tuples);
    let mut insert = InsertExecutor::new(
        buffer_pool,
        TransactionId::new(),
        Box::new(values),
        table_id,
    )?;
    insert.open()?;
    let inserted = insert.next()?;
    insert.close();
    buffer_pool.flush_all_pages()?;

    info!(
        heap_file = %table.heap_file.display(),
        inserted = inserted.value(0).as_i32(),
        "converted"
    );
    Ok(())
}

fn print_all(executor: &mut dyn Executor) -> Result<()> {
    executor.open()?;
    while executor.has_next()? {
        println!("{}", executor.next()?);
    }
    executor.close();
    Ok(())
}

fn main() -> Result<()> {
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let buffer_pool = BufferPool::new(Catalog::new(), config.pool_size);

    match &config.command {
        Command::Convert { csv, table } => convert(&buffer_pool, csv, table),
        Command::Print { table } => {
            let table_id = open_table(&buffer_pool, table)?;
            let mut scan = SeqScanExecutor::new(&buffer_pool, TransactionId::new(), table_id)?;
            print_all(&mut scan)
        }
        Command::Aggregate {
            table,
            op,
            field,
            group_by,
        } => {
            let table_id = open_table(&buffer_pool, table)?;
            let scan = SeqScanExecutor::new(&buffer_pool, TransactionId::new(), table_id)?;
            let mut aggregate = AggregateExecutor::new(Box::new(scan), *field, *group_by, *op)?;
            println!("{}", aggregate.schema());
            print_all(&mut aggregate)
        }
    }
}
