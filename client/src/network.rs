use log::{debug, info};
use std::net::SocketAddr;
use tokio::io::{
    stdin, stdout, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpStream;

pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

pub struct Client {
    stream: TcpStream,
    server_addr: SocketAddr,
}

impl Client {
    pub async fn connect(server_addr: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(server_addr).await?;
        stream.set_nodelay(true)?;
        let server_addr = stream.peer_addr()?;
        info!("Connected to {}", server_addr);

        Ok(Client {
            stream,
            server_addr,
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Plays on the terminal until the server closes the connection.
    pub async fn run(self) -> Result<(), ClientError> {
        self.run_with(BufReader::new(stdin()), stdout()).await
    }

    /// Sends each line of `input` to the server and copies every line the
    /// server sends to `output`. Once `input` ends the write side is shut
    /// down, and the loop keeps printing until the server hangs up.
    pub async fn run_with<R, W>(self, input: R, mut output: W) -> Result<(), ClientError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (reader, mut writer) = self.stream.into_split();
        let mut server_lines = BufReader::new(reader).lines();
        let mut input_lines = input.lines();
        let mut input_open = true;

        loop {
            tokio::select! {
                line = server_lines.next_line() => {
                    match line? {
                        Some(line) => {
                            output.write_all(shared::frame(&line).as_bytes()).await?;
                            output.flush().await?;
                        }
                        None => {
                            info!("Server closed the connection");
                            break;
                        }
                    }
                },

                line = input_lines.next_line(), if input_open => {
                    match line? {
                        Some(line) => {
                            writer.write_all(shared::frame(&line).as_bytes()).await?;
                        }
                        None => {
                            debug!("Input ended, closing write side");
                            input_open = false;
                            writer.shutdown().await?;
                        }
                    }
                },
            }
        }

        Ok(())
    }
}
