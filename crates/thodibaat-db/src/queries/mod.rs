mod conversations;
mod directory;
mod messages;
mod users;
