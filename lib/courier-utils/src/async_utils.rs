use tokio::sync::mpsc;

/// Forwards everything from `channel` through `f` into a new channel. Items
/// mapped to `None` are dropped. The forwarding task ends as soon as either
/// side goes away.
pub fn pipe_unbounded_channel<I, O, F>(mut channel: mpsc::UnboundedReceiver<I>, mut f: F) -> mpsc::UnboundedReceiver<O>
where
    I: 'static + Send,
    O: 'static + Send,
    F: 'static + FnMut(I) -> Option<O> + Send,
{
    let (sender, receiver) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sender.closed() => {
                    // receiver is dropped, drop sender
                    break;
                },

                message_res = channel.recv() => {
                    let Some(message_in) = message_res else {
                        // previous sender is dropped, drop sender
                        break;
                    };
                    if let Some(message_out) = f(message_in) {
                        if sender.send(message_out).is_err() {
                            break;
                        }
                    }
                },
            }
        }
    });
    receiver
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn maps_filters_and_closes() {
        let (sender, receiver) = mpsc::unbounded_channel::<u32>();
        let mut piped = pipe_unbounded_channel(receiver, |n| (n % 2 == 0).then(|| n.to_string()));

        for n in 0..5 {
            sender.send(n).unwrap();
        }
        drop(sender);

        let mut out = Vec::new();
        while let Some(item) = piped.recv().await {
            out.push(item);
        }
        assert_eq!(out, vec!["0", "2", "4"]);
    }
}
